//! UexpMesh CLI binary

fn main() -> anyhow::Result<()> {
    uexpmesh::cli::run_cli()
}
