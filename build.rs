// Build script for mapnik-ffi
//
// Note: cbindgen header generation is not used because cbindgen does not
// recognize Rust 2024's #[unsafe(no_mangle)] attribute syntax, and the
// exported surface must stay byte-compatible with the historical
// mapnik_c_api.h. The header (include/mapnik_c_api.h) is maintained manually.

fn main() {
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=include/mapnik_c_api.h");
}
