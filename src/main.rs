fn main() -> anyhow::Result<()> {
    journal_tui::cli::run()
}
