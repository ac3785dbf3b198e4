// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mudra_studio::classifier::{interpret_response, StatusCode};

#[derive(Arbitrary, Debug)]
struct Response {
    status: u16,
    body: Vec<u8>,
}

fuzz_target!(|input: Response| {
    let Ok(status) = StatusCode::from_u16(input.status) else {
        return;
    };
    if let Ok(prediction) = interpret_response(status, &input.body) {
        assert!(status.is_success());
        assert!(prediction.confidence.is_finite());
    }
});
