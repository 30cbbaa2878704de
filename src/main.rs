fn main() -> anyhow::Result<()> {
    embargo_ledger::run()?;
    Ok(())
}
