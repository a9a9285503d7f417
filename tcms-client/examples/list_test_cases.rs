// List confirmed test cases, mirroring the minimal `~/.tcms.conf` setup
// described in the crate docs. Run with:
//
//     RUST_LOG=tcms_client=debug cargo run --example list_test_cases

use anyhow::Result;
use tcms_client::{Tcms, Value};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tcms = Tcms::new()?;
    let filter = Value::from_pairs([("case_status__is_confirmed", Value::from(true))]);
    let cases = tcms.invoke("TestCase.filter", vec![filter])?;

    for case in cases.as_array().unwrap_or(&[]) {
        let id = case.get("id").and_then(Value::as_i64).unwrap_or_default();
        let summary = case.get("summary").and_then(Value::as_str).unwrap_or("?");
        println!("TC-{id}: {summary}");
    }
    Ok(())
}
