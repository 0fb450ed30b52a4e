fn main() {
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();

    if std::env::var_os("CARGO_FEATURE_SYS").is_some() {
        println!("cargo:rerun-if-env-changed=XSLAM_LIB_DIR");
        if let Ok(dir) = std::env::var("XSLAM_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }
    }

    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    if let Ok(bindings) = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        bindings.write_to_file(format!("{}/include/xslam.h", crate_dir));
    }
}
