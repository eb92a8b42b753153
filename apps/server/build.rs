use std::env::var;

use dotenvy::dotenv;

/// Forwarded from `.env` so the binary knows where to look for its config file.
const FORWARDED: &str = "UPPE_CONFIG";

fn main() {
    dotenv().ok();

    if let Ok(value,) = var(FORWARDED,) {
        println!("cargo:rustc-env={FORWARDED}={value}");
    }
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed={FORWARDED}");
}
