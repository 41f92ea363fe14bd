use super::SynthCommand;
use crate::error::Error;
use crate::runner::Runner;
use crate::writer::Writer;
use eyre::WrapErr;
use serde_json::json;
use stackgraph_core::{synthesize, Synthesis};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    kind: String,
}

pub(crate) struct SynthRunner<'a> {
    pub(super) command: SynthCommand,
    pub(super) writer: &'a Writer,
}

impl Runner for SynthRunner<'_> {
    fn run(&mut self) -> Result<(), Error> {
        let graph = self.graph(&self.command.target)?;
        let synthesis = synthesize(&graph)?;

        if self.command.stdout {
            return self.print(&synthesis);
        }

        let output = &self.command.output;

        let paths = synthesis.write_to(output).map_err(|e| {
            self.error(
                Some("Failed to write the synthesized stack"),
                Some(&format!("Check that {} is writable.", output.display())),
                Some(Box::new(e)),
            )
        })?;

        if self.writer.is_structured() {
            return self.writer.json(json!({
                "stack": synthesis.stack_name,
                "files": paths,
                "resources": synthesis.template.resources.len(),
            }));
        }

        self.writer.text(&format!("{}\n", resources_table(&synthesis)))?;

        for path in paths {
            self.writer.text(&format!(
                "{} {}\n",
                console::style("Wrote").green().bold(),
                path.display()
            ))?;
        }

        Ok(())
    }
}

impl SynthRunner<'_> {
    /// Template only, as pretty JSON in text mode and compact JSON in structured mode
    fn print(&self, synthesis: &Synthesis) -> Result<(), Error> {
        let template =
            serde_json::to_value(&synthesis.template).wrap_err("Failed to serialize the template")?;

        if self.writer.is_structured() {
            return self.writer.json(template);
        }

        let pretty =
            serde_json::to_string_pretty(&template).wrap_err("Failed to format the template")?;

        self.writer.text(&format!("{pretty}\n"))
    }
}

fn resources_table(synthesis: &Synthesis) -> String {
    let rows = synthesis
        .template
        .resources
        .iter()
        .map(|(logical_id, resource)| ResourceRow {
            logical_id: logical_id.clone(),
            kind: resource.kind.clone(),
        });

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}
