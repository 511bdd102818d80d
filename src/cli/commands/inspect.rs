//! Inspect command - show the structure of a class unit

use crate::cli::args::InspectArgs;
use crate::error::{WeaveError, WeaveResult};
use crate::ui;
use crate::unit::{access, Annotation, ClassNode, UnitCodec, WireCodec};
use console::style;
use tokio::fs;

/// Execute the inspect command
pub async fn execute(args: InspectArgs) -> WeaveResult<()> {
    if !args.input.exists() {
        return Err(WeaveError::PathNotFound(args.input));
    }
    let bytes = fs::read(&args.input)
        .await
        .map_err(|e| WeaveError::io(format!("reading {}", args.input.display()), e))?;
    let node = WireCodec.read(&bytes)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&node)?);
    } else {
        print_node(&node, args.code);
    }
    Ok(())
}

fn access_names(flags: u16) -> String {
    let names: Vec<&str> = [
        (access::PUBLIC, "public"),
        (access::PRIVATE, "private"),
        (access::STATIC, "static"),
        (access::FINAL, "final"),
        (access::INTERFACE, "interface"),
        (access::ABSTRACT, "abstract"),
    ]
    .iter()
    .filter(|(bit, _)| flags & bit != 0)
    .map(|(_, name)| *name)
    .collect();
    names.join(" ")
}

fn annotation_list(annotations: &[Annotation]) -> String {
    annotations
        .iter()
        .map(|a| a.descriptor.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_node(node: &ClassNode, code: bool) {
    let header = &node.header;
    ui::section(&header.name.replace('/', "."));
    ui::key_value("access", &access_names(header.access));
    ui::key_value("super", header.super_name.as_deref().unwrap_or("-"));
    if !header.interfaces.is_empty() {
        ui::key_value("interfaces", &header.interfaces.join(", "));
    }
    if !header.annotations.is_empty() {
        ui::key_value("annotations", &annotation_list(&header.annotations));
    }

    println!();
    println!("{} ({})", style("Fields").bold(), node.body.fields.len());
    for field in &node.body.fields {
        println!("  {} {}", field.name, style(&field.descriptor).dim());
    }

    println!();
    println!("{} ({})", style("Methods").bold(), node.body.methods.len());
    for method in &node.body.methods {
        let body = match &method.code {
            Some(c) => format!(
                "{} insns, stack {}, locals {}",
                c.instructions.len(),
                c.max_stack,
                c.max_locals
            ),
            None => "no code".to_string(),
        };
        println!(
            "  {}{} {}",
            method.name,
            style(&method.descriptor).dim(),
            style(format!("[{}]", body)).dim()
        );
        if !method.annotations.is_empty() {
            println!("    @ {}", annotation_list(&method.annotations));
        }
        if let (true, Some(c)) = (code, &method.code) {
            for insn in &c.instructions {
                println!("    {}", insn);
            }
        }
    }
}
