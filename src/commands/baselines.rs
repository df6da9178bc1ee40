//! `bastion baselines`

use crate::catalog::{self, BASELINES};
use crate::ui;
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    ui::header("Baselines");
    let schema = catalog::schema();
    for name in BASELINES {
        let description = catalog::baseline(name)?.compose(schema, "-")?;
        let total = description.topic_count(None);
        let defined = description.topics().filter(|(_, t)| t.is_defined()).count();
        println!(
            "  {} {}",
            format!("{name:<8}").cyan().bold(),
            format!("{defined}/{total} topics defined").dimmed()
        );
        for (key, value) in &description.settings {
            let shown = if key.contains("password") {
                "********"
            } else {
                value.as_str()
            };
            ui::dim(&format!("  {key} = {shown}"));
        }
    }
    Ok(())
}
