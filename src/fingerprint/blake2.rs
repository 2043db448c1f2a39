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

use blake2::digest::{Input, VariableOutput};
use blake2::VarBlake2b;

use super::{Fingerprint, FingerprintAlgorithm, FingerprintContext};

/// The size, in bytes, of the digest this algorithm produces.
const OUTPUT_SIZE: usize = 32;

/// An alternative fingerprint algorithm: 256-bit BLAKE2b.
///
/// Gated behind the `hash-algorithms` feature, same as the teacher crate's
/// own optional hash algorithms.
#[derive(Debug, Default)]
pub struct Blake2Algorithm;

impl FingerprintAlgorithm for Blake2Algorithm {
    fn name(&self) -> &'static str {
        "blake2b"
    }

    fn new_context(&self) -> Box<dyn FingerprintContext> {
        Box::new(Blake2Context(
            VarBlake2b::new(OUTPUT_SIZE).expect("32 is a valid BLAKE2b output size"),
        ))
    }
}

struct Blake2Context(VarBlake2b);

impl FingerprintContext for Blake2Context {
    fn update(&mut self, data: &[u8]) {
        self.0.input(data);
    }

    fn finalize(self: Box<Self>) -> Fingerprint {
        let mut digest = [0u8; OUTPUT_SIZE];
        self.0.variable_result(|result| digest.copy_from_slice(result));
        Fingerprint::new(hex::encode(digest))
    }
}
