use std::io::{self, Write};

use tidybank_core::{Resolution, ResolutionRequest, Resolver};

/// Renders resolution requests on the terminal and blocks for an answer.
pub struct StdinResolver;

impl Resolver for StdinResolver {
    fn resolve(&mut self, request: &ResolutionRequest) -> Resolution {
        match request {
            ResolutionRequest::Role { role, candidates } => {
                println!("\nCould not confidently assign the '{role}' column.");
                if candidates.is_empty() {
                    println!("No unclaimed columns look suitable.");
                } else {
                    for candidate in candidates.iter().take(8) {
                        println!(
                            "  {}) {} (score {:.2})",
                            candidate.column, candidate.name, candidate.confidence
                        );
                    }
                }
                match prompt("Column index for this role (empty to skip)") {
                    Ok(answer) if answer.is_empty() => Resolution::Skip,
                    Ok(answer) => match answer.parse::<usize>() {
                        Ok(index) => Resolution::Column(index),
                        Err(_) => Resolution::Skip,
                    },
                    Err(_) => Resolution::Skip,
                }
            }
            ResolutionRequest::WritePolicy { sheet, existing_rows } => {
                println!("\nSheet '{sheet}' already holds {existing_rows} data rows.");
                match prompt("Overwrite or append? [o/a]") {
                    Ok(answer) if answer.eq_ignore_ascii_case("o") => Resolution::Overwrite,
                    _ => Resolution::Append,
                }
            }
        }
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
