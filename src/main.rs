#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = ora_staff_grader::run().await {
        eprintln!("ora-staff-grader fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
