// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use ratingcrawl::utils::telemetry;

#[test]
fn test_telemetry_initialization_is_repeatable() {
    telemetry::init_telemetry();
    // A second call must not panic
    telemetry::init_telemetry();

    tracing::info!(request_id = "req-1", url = "https://channelstore.roku.com/details/a/b", "Structured log");
    tracing::error!(error = "boom", "Operation failed");
}
