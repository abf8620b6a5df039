use std::env;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("fixtures.rs");

    let mut fixture_list = String::new();
    fixture_list.push_str("// Auto-generated file listing all fixtures\n\n");
    fixture_list.push_str("pub const FIXTURES: &[(&str, &str, &str)] = &[\n");

    let mut entries: Vec<_> = WalkDir::new("data")
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    // data/<area>/<name>.json
    for entry in entries {
        let path = entry.path();
        let relative_path = path.strip_prefix("data").unwrap();

        let components: Vec<String> = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        if components.len() == 2 {
            let area = &components[0];
            let name = components[1].trim_end_matches(".json");
            let include_path = format!("data/{area}/{}", components[1]);

            fixture_list.push_str(&format!(
                "    (\"{area}\", \"{name}\", include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/{include_path}\"))),\n",
            ));
        }
    }

    fixture_list.push_str("];\n");

    fs::write(&dest_path, fixture_list).unwrap();

    println!("cargo:rerun-if-changed=data");
}
