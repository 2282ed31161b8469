fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=GUROBI_PATH");
    #[cfg(feature = "gurobi")]
    println!("cargo:rustc-link-search={}", std::env::var("GUROBI_PATH")?);
    Ok(())
}
