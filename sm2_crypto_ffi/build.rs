use std::env;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");

    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let header_path = Path::new(&manifest_dir).join("include").join("sm2_crypto.h");

    let result = cbindgen::Builder::new()
        .with_crate(&manifest_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("SM2_CRYPTO_H")
        .with_no_includes()
        .with_sys_include("stdbool.h")
        .with_sys_include("stddef.h")
        .generate();

    // 头文件生成失败不影响库本身
    match result {
        Ok(bindings) => {
            bindings.write_to_file(header_path);
        }
        Err(e) => println!("cargo:warning=Unable to generate C header: {}", e),
    }
}
