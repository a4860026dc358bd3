use anyhow::Result;

// Print the OpenAPI document of the dashboard routes
fn main() -> Result<()> {
    println!("{}", dashgate::dashboard::openapi().to_pretty_json()?);
    Ok(())
}
