fn main() -> anyhow::Result<()> {
    synthbench_cli::run()
}
