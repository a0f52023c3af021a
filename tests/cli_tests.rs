//! Integration tests for CLI wiring.
//!
//! The binary is a thin adapter over the library; these check exit codes,
//! the stderr payload and the shape of the JSONL it writes.

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use std::fs;
    use std::path::Path;
    use std::process::{Command, Output};
    use tempfile::TempDir;

    fn graphdb(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_graphdb"))
            .args(args)
            .env_remove("GRAPHDB_WORKERS")
            .env_remove("GOOGLE_CLOUD_PROJECT")
            .env_remove("VERTEX_ACCESS_TOKEN")
            .env("RUST_LOG", "off")
            .output()
            .expect("Failed to run graphdb")
    }

    fn read_jsonl(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .expect("Failed to read output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("Invalid JSON line"))
            .collect()
    }

    fn payload(output: &Output) -> Value {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last = stderr
            .lines()
            .rev()
            .find(|l| l.starts_with('{'))
            .expect("No JSON payload on stderr");
        serde_json::from_str(last).expect("Invalid payload")
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let src = dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(
            src.join("greet.ts"),
            "function helper(): void {}\nexport function greet(): void {\n  helper();\n}\n",
        )
        .expect("write ts");
        fs::write(
            src.join("Orders.cs"),
            "namespace Shop\n{\n    public class Orders\n    {\n        public void Place() { }\n    }\n}\n",
        )
        .expect("write cs");
        fs::write(dir.path().join("notes.txt"), "ignored\n").expect("write txt");
        dir
    }

    #[test]
    fn test_cli_ingest_single_output() {
        let dir = fixture();
        let out = dir.path().join("graph.jsonl");
        let output = graphdb(&[
            "ingest",
            "--dir",
            dir.path().join("src").to_str().expect("utf8"),
            "--output",
            out.to_str().expect("utf8"),
            "--workers",
            "2",
        ]);
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

        let lines = read_jsonl(&out);
        let files = lines.iter().filter(|v| v["type"] == "File").count();
        assert_eq!(files, 2);
        assert!(lines.iter().any(|v| v["id"] == "Shop.Orders" && v["type"] == "Class"));
        assert!(lines
            .iter()
            .any(|v| v["type"] == "CALLS" && v["source"].as_str().is_some_and(|s| s.ends_with(":greet"))));
        assert!(lines
            .iter()
            .filter(|v| v["type"] == "Function")
            .all(|v| v["embedding"].as_array().is_some_and(|e| e.len() == 768)));

        let report = payload(&output);
        assert_eq!(report["status"], "ok");
        assert_eq!(report["data"]["processed"], 2);
        assert_eq!(report["data"]["cancelled"], false);
    }

    #[test]
    fn test_cli_ingest_split_output() {
        let dir = fixture();
        let out_dir = TempDir::new().expect("Failed to create output dir");
        let nodes = out_dir.path().join("nodes.jsonl");
        let edges = out_dir.path().join("edges.jsonl");
        let output = graphdb(&[
            "ingest",
            "--dir",
            dir.path().to_str().expect("utf8"),
            "--nodes",
            nodes.to_str().expect("utf8"),
            "--edges",
            edges.to_str().expect("utf8"),
        ]);
        assert!(output.status.success());

        let node_lines = read_jsonl(&nodes);
        let edge_lines = read_jsonl(&edges);
        assert!(!node_lines.is_empty());
        assert!(!edge_lines.is_empty());
        assert!(node_lines.iter().all(|v| v.get("id").is_some()));
        assert!(edge_lines
            .iter()
            .all(|v| v.get("source").is_some() && v.get("target").is_some()));
        assert!(edge_lines.iter().any(|v| v["type"] == "DEFINED_IN"));

        let report = payload(&output);
        assert_eq!(report["data"]["skipped"], 1);
    }

    #[test]
    fn test_cli_file_list() {
        let dir = fixture();
        let list = dir.path().join("files.txt");
        fs::write(
            &list,
            format!("{}\n\n", dir.path().join("src/greet.ts").display()),
        )
        .expect("write list");
        let out = dir.path().join("graph.jsonl");

        let output = graphdb(&[
            "ingest",
            "--file-list",
            list.to_str().expect("utf8"),
            "-o",
            out.to_str().expect("utf8"),
        ]);
        assert!(output.status.success());
        assert_eq!(payload(&output)["data"]["submitted"], 1);
        assert_eq!(
            read_jsonl(&out).iter().filter(|v| v["type"] == "File").count(),
            1
        );
    }

    #[test]
    fn test_cli_invalid_config_fails() {
        let dir = fixture();
        let config = dir.path().join("graphdb.toml");
        fs::write(&config, "workers = 0\n").expect("write config");

        let output = graphdb(&[
            "ingest",
            "--dir",
            dir.path().to_str().expect("utf8"),
            "--config",
            config.to_str().expect("utf8"),
            "-o",
            dir.path().join("graph.jsonl").to_str().expect("utf8"),
        ]);
        assert_eq!(output.status.code(), Some(1));

        let report = payload(&output);
        assert_eq!(report["status"], "error");
        assert_eq!(report["kind"], "Config");
    }

    #[test]
    fn test_cli_vertex_without_project_fails() {
        let dir = fixture();
        let output = graphdb(&[
            "ingest",
            "--dir",
            dir.path().to_str().expect("utf8"),
            "--embedding",
            "vertex",
            "-o",
            dir.path().join("graph.jsonl").to_str().expect("utf8"),
        ]);
        assert_eq!(output.status.code(), Some(1));
        assert_eq!(payload(&output)["kind"], "Config");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let output = graphdb(&[]);
        assert!(!output.status.success());
    }
}
