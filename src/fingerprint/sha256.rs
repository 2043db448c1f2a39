/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use digest::Digest;
use sha2::Sha256;

use super::{Fingerprint, FingerprintAlgorithm, FingerprintContext};

/// The default fingerprint algorithm: SHA-256, rendered as lowercase hex.
#[derive(Debug, Default)]
pub struct Sha256Algorithm;

impl FingerprintAlgorithm for Sha256Algorithm {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn new_context(&self) -> Box<dyn FingerprintContext> {
        Box::new(Sha256Context(Sha256::new()))
    }
}

struct Sha256Context(Sha256);

impl FingerprintContext for Sha256Context {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Fingerprint {
        let digest = self.0.finalize();
        Fingerprint::new(hex::encode(digest))
    }
}
