fn main() -> anyhow::Result<()> {
    construe_drill::run()
}
