// ABOUTME: Templates command implementation.
// ABOUTME: Lists registered pipeline templates with their steps in every output mode.

use rollout::error::Result;
use rollout::output::{Output, OutputMode};
use rollout::pipeline::{PipelineTemplate, TemplateRegistry};
use serde::Serialize;

#[derive(Serialize)]
struct TemplateEntry<'a> {
    name: &'a str,
    #[serde(flatten)]
    template: &'a PipelineTemplate,
}

pub fn templates(registry: &TemplateRegistry, output: &Output) -> Result<()> {
    match output.mode() {
        OutputMode::Quiet => {
            for name in registry.names() {
                println!("{name}");
            }
        }
        OutputMode::Json => {
            let entries: Vec<_> = registry
                .iter()
                .map(|(name, template)| TemplateEntry { name, template })
                .collect();
            println!("{}", serde_json::to_string(&entries).map_err(std::io::Error::other)?);
        }
        OutputMode::Normal => {
            for (name, template) in registry.iter() {
                println!(
                    "{name} ({}, {}){}",
                    template.strategy(),
                    template.environment(),
                    if template.approval_required() {
                        ", approval required"
                    } else {
                        ""
                    }
                );
                if !template.description().is_empty() {
                    println!("  {}", template.description());
                }
                for step in template.steps().iter() {
                    let mut line = format!(
                        "    {:<16} {:<24} {}",
                        step.phase.as_str(),
                        step.name,
                        step.action.describe()
                    );
                    if let Some(rollback) = &step.rollback {
                        line.push_str(&format!(" (rollback: {})", rollback.describe()));
                    }
                    if !step.required {
                        line.push_str(" [optional]");
                    }
                    println!("{line}");
                }
            }
        }
    }
    Ok(())
}
