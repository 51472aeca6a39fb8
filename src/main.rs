fn main() -> anyhow::Result<()> {
    shared_notes::cli::run()
}
