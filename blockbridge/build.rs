use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

macro_rules! gen_tests {
    ($test_file:ident, $path:literal, $fmt:expr) => {
        println!("cargo:rerun-if-changed={}", $path);
        let mut entries = fs::read_dir($path)
            .expect("Test directory not found")
            .map(|entry| entry.unwrap().path())
            .collect::<Vec<_>>();
        entries.sort();
        for file in entries {
            let file = file.canonicalize().unwrap();
            let file_stem = file.file_stem().unwrap().to_str().unwrap().replace('-', "_");
            let file_ext = file.extension().unwrap_or_default().to_str().unwrap();
            let path = file.display();

            if file.is_file() && file_ext == "ts" {
                writeln!($test_file, $fmt, file_stem, path).unwrap();
            }
        }
    };
}

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = PathBuf::from(out_dir).join("generated_tests.rs");
    let mut test_file = fs::File::create(dest_path).unwrap();

    gen_tests!(
        test_file,
        "./tests/pass",
        r#"
                #[test]
                fn tp_{}() {{
                    check_pass("{}").unwrap();
                }}
                "#
    );
    gen_tests!(
        test_file,
        "./tests/fail",
        r#"
                #[test]
                fn tf_{}() {{
                    check_fail("{}").unwrap();
                }}
                "#
    );
}
