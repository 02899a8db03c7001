fn main() -> anyhow::Result<()> {
    cysteine_scan::cli::run()
}
