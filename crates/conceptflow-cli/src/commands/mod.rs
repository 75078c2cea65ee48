pub mod init;
pub mod laplacian;
pub mod replay;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use conceptflow_core::parser::{self, GraphFile};

/// Read a graph file, or merge a directory of them.
pub fn read_graph_file(path: &Path) -> Result<GraphFile> {
    if path.is_dir() {
        parser::load_graph_directory(path)
    } else {
        parser::parse_graph_file(path)
    }
}
