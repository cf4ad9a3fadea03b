fn main() -> anyhow::Result<()> {
    joplin_bridge::cli::run()
}
