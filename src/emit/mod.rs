//! Output sinks.
//!
//! Node lines flatten the property map into the top-level object and add
//! `id` and `type` (the label). Edge lines are `{source, target, type}`.
//! Reserved keys win over properties of the same name.

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Node};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Destination for extracted nodes and edges.
///
/// Workers share one emitter, so implementations serialize internally.
pub trait Emitter: Send + Sync {
    /// Write one node.
    fn emit_node(&self, node: &Node) -> Result<()>;

    /// Write one edge.
    fn emit_edge(&self, edge: &Edge) -> Result<()>;

    /// Flush and release the sink.
    fn close(&self) -> Result<()>;
}

type Sink = BufWriter<Box<dyn Write + Send>>;

/// JSON object for a node line.
pub fn node_json(node: &Node) -> Value {
    let mut out: Map<String, Value> = node
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    out.insert("id".to_string(), Value::String(node.id.clone()));
    out.insert("type".to_string(), Value::String(node.label.clone()));
    Value::Object(out)
}

/// JSON object for an edge line.
pub fn edge_json(edge: &Edge) -> Value {
    serde_json::json!({
        "source": edge.source_id,
        "target": edge.target_id,
        "type": edge.edge_type,
    })
}

fn write_line(sink: &mut Sink, value: &Value) -> Result<()> {
    serde_json::to_writer(&mut *sink, value)?;
    sink.write_all(b"\n")
        .map_err(|e| GraphError::Emit(format!("write failed: {}", e)))
}

fn flush(sink: &mut Sink) -> Result<()> {
    sink.flush()
        .map_err(|e| GraphError::Emit(format!("flush failed: {}", e)))
}

fn create(path: &Path) -> Result<Box<dyn Write + Send>> {
    let file = File::create(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

/// Single interleaved JSONL stream.
pub struct JsonlEmitter {
    sink: Mutex<Sink>,
}

impl JsonlEmitter {
    /// Emit into any writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(BufWriter::new(writer)),
        }
    }

    /// Emit into a newly created file.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(create(path)?))
    }
}

impl Emitter for JsonlEmitter {
    fn emit_node(&self, node: &Node) -> Result<()> {
        write_line(&mut self.sink.lock(), &node_json(node))
    }

    fn emit_edge(&self, edge: &Edge) -> Result<()> {
        write_line(&mut self.sink.lock(), &edge_json(edge))
    }

    fn close(&self) -> Result<()> {
        flush(&mut self.sink.lock())
    }
}

/// Nodes and edges in two separate JSONL streams.
pub struct SplitJsonlEmitter {
    nodes: Mutex<Sink>,
    edges: Mutex<Sink>,
}

impl SplitJsonlEmitter {
    /// Emit into two writers.
    pub fn new(nodes: Box<dyn Write + Send>, edges: Box<dyn Write + Send>) -> Self {
        Self {
            nodes: Mutex::new(BufWriter::new(nodes)),
            edges: Mutex::new(BufWriter::new(edges)),
        }
    }

    /// Emit into two newly created files.
    pub fn create(nodes: &Path, edges: &Path) -> Result<Self> {
        Ok(Self::new(create(nodes)?, create(edges)?))
    }
}

impl Emitter for SplitJsonlEmitter {
    fn emit_node(&self, node: &Node) -> Result<()> {
        write_line(&mut self.nodes.lock(), &node_json(node))
    }

    fn emit_edge(&self, edge: &Edge) -> Result<()> {
        write_line(&mut self.edges.lock(), &edge_json(edge))
    }

    fn close(&self) -> Result<()> {
        flush(&mut self.nodes.lock())?;
        flush(&mut self.edges.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::{EDGE_CALLS, LABEL_FIELD, LABEL_FUNCTION, PROP_TYPE};
    use std::sync::Arc;

    /// Writer that appends into a shared buffer.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .expect("utf8")
                .lines()
                .map(|l| serde_json::from_str(l).expect("json line"))
                .collect()
        }
    }

    fn sample_node() -> Node {
        Node::definition("a.ts:main", LABEL_FUNCTION, "main", "a.ts", 4)
            .with_property("id", "ignored")
    }

    #[test]
    fn test_node_line_flattens_properties() {
        let value = node_json(&sample_node());
        assert_eq!(value["id"], "a.ts:main");
        assert_eq!(value["type"], LABEL_FUNCTION);
        assert_eq!(value["name"], "main");
        assert_eq!(value["line"], 4);
        assert!(value.get("properties").is_none());
    }

    #[test]
    fn test_declared_type_survives_flattening() {
        let field = Node::definition("N.A:count", LABEL_FIELD, "count", "A.cs", 1)
            .with_property(PROP_TYPE, "int");
        let value = node_json(&field);
        assert_eq!(value["type"], LABEL_FIELD);
        assert_eq!(value[PROP_TYPE], "int");
    }

    #[test]
    fn test_edge_line() {
        let value = edge_json(&Edge::new("a", "b", EDGE_CALLS));
        assert_eq!(value, serde_json::json!({"source": "a", "target": "b", "type": "CALLS"}));
    }

    #[test]
    fn test_jsonl_interleaved() {
        let buf = SharedBuf::default();
        let emitter = JsonlEmitter::new(Box::new(buf.clone()));
        emitter.emit_node(&sample_node()).expect("node");
        emitter.emit_edge(&Edge::new("a", "b", EDGE_CALLS)).expect("edge");
        emitter.close().expect("close");

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "a.ts:main");
        assert_eq!(lines[1]["source"], "a");
    }

    #[test]
    fn test_split_streams() {
        let nodes = SharedBuf::default();
        let edges = SharedBuf::default();
        let emitter = SplitJsonlEmitter::new(Box::new(nodes.clone()), Box::new(edges.clone()));
        emitter.emit_edge(&Edge::new("a", "b", EDGE_CALLS)).expect("edge");
        emitter.emit_node(&sample_node()).expect("node");
        emitter.close().expect("close");

        assert_eq!(nodes.lines().len(), 1);
        assert_eq!(edges.lines().len(), 1);
        assert_eq!(edges.lines()[0]["type"], "CALLS");
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graph.jsonl");
        let emitter = JsonlEmitter::create(&path).expect("create");
        emitter.emit_node(&sample_node()).expect("node");
        emitter.close().expect("close");

        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 1);
    }
}
