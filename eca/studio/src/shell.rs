//! Interactive line shell over an [`ArtworkStudio`].

use eca_core::{ArtworkStudio, GenerateRequest, MintPreview};
use eca_spec::{Address, InitialState, Rule, SizeClass, TokenId, TokenParams, Wei};
use tokio::{io::AsyncBufReadExt, io::BufReader, select};
use tracing::info;

const HELP: &str = "\
Commands:
  :help                                 show this message
  :quit                                 leave the shell
  accounts                              list node accounts
  price [size]                          base price, or the floor for one size class
  preview <rule> <state> <size>         token id and initial row without minting
  generate <rule> <state> <size> [eth] [from=<address>]
                                        mint, paying the floor unless an amount is given,
                                        from the first node account unless one is named
  draw <token-id> | <rule> <state> <size>
                                        resolve and print artwork content";

/// Parsed shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Print the command list.
    Help,
    /// Leave the shell.
    Quit,
    /// List node accounts.
    Accounts,
    /// Base price, or the floor for one size class.
    Price(Option<SizeClass>),
    /// Token id and initial row, without minting.
    Preview(TokenParams),
    /// Mint an artwork.
    Generate {
        /// Artwork parameters.
        params: TokenParams,
        /// Paying account; the node's first account when absent.
        from: Option<Address>,
        /// Payment; the size-class floor when absent.
        payment: Option<Wei>,
    },
    /// Resolve and print artwork content.
    Draw(TokenId),
}

/// Build validated parameters; rule, then state, then size.
pub fn parse_params(rule: &str, state: &str, size: &str) -> Result<TokenParams, String> {
    let rule = rule
        .parse::<i64>()
        .map_err(|_| format!("rule {rule:?} is not an integer"))
        .and_then(|r| Rule::new(r).map_err(|e| e.to_string()))?;
    let state = state.parse::<InitialState>().map_err(|e| e.to_string())?;
    let size = size
        .parse::<i64>()
        .map_err(|_| format!("size {size:?} is not an integer"))
        .and_then(|s| SizeClass::new(s).map_err(|e| e.to_string()))?;
    Ok(TokenParams::new(rule, state, size))
}

/// Parse one line of shell input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = words.split_first() else {
        return Ok(None);
    };
    let command = match (*head, args) {
        (":help" | "help", []) => ShellCommand::Help,
        (":quit" | ":q" | "quit" | "exit", []) => ShellCommand::Quit,
        ("accounts", []) => ShellCommand::Accounts,
        ("price", []) => ShellCommand::Price(None),
        ("price", [size]) => {
            let size = size
                .parse::<i64>()
                .map_err(|_| format!("size {size:?} is not an integer"))?;
            ShellCommand::Price(Some(SizeClass::new(size).map_err(|e| e.to_string())?))
        }
        ("preview", [rule, state, size]) => {
            ShellCommand::Preview(parse_params(rule, state, size)?)
        }
        ("generate", [rule, state, size, rest @ ..]) if rest.len() <= 2 => {
            let params = parse_params(rule, state, size)?;
            let (mut from, mut payment) = (None, None);
            for word in rest {
                if let Some(addr) = word.strip_prefix("from=") {
                    if from.is_some() {
                        return Err("generate accepts one from= account".into());
                    }
                    let addr = addr
                        .parse::<Address>()
                        .map_err(|e| format!("invalid from address: {e}"))?;
                    from = Some(addr);
                } else {
                    if payment.is_some() {
                        return Err("generate accepts one payment amount".into());
                    }
                    payment = Some(Wei::from_ether_str(word).map_err(|e| e.to_string())?);
                }
            }
            ShellCommand::Generate {
                params,
                from,
                payment,
            }
        }
        ("draw", [token_id]) => {
            let token_id = token_id.parse::<TokenId>().map_err(|e| e.to_string())?;
            ShellCommand::Draw(token_id)
        }
        ("draw", [rule, state, size]) => {
            ShellCommand::Draw(parse_params(rule, state, size)?.encode())
        }
        (other, _) => return Err(format!("unrecognized input {other:?}. try :help")),
    };
    Ok(Some(command))
}

/// Run the shell until `:quit`, end of input, or Ctrl-C.
pub async fn run(studio: ArtworkStudio) -> anyhow::Result<()> {
    info!("studio shell ready. Type :help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        select! {
            maybe_line = lines.next_line() => {
                let Some(line) = maybe_line? else { break };
                match parse_command(&line) {
                    Ok(None) => continue,
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(err) = execute(&studio, command).await {
                            println!("error: {err}");
                        }
                    }
                    Err(msg) => println!("{msg}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

async fn execute(studio: &ArtworkStudio, command: ShellCommand) -> anyhow::Result<()> {
    match command {
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
        ShellCommand::Accounts => {
            for account in studio.accounts().await? {
                println!("{account}");
            }
        }
        ShellCommand::Price(None) => {
            let price = studio.min_price().await?;
            println!("base price {} ether", price.to_ether_string());
        }
        ShellCommand::Price(Some(size)) => {
            let floor = studio.quote(size).await?;
            println!("size {size}: minimum {} ether", floor.to_ether_string());
        }
        ShellCommand::Preview(params) => {
            let preview = MintPreview::from(params);
            println!("{}", preview.message());
            println!("token id {}", preview.token_id);
        }
        ShellCommand::Generate {
            params,
            from,
            payment,
        } => {
            let preview = MintPreview::from(params);
            println!("{}", preview.message());
            let outcome = studio
                .generate(GenerateRequest {
                    params,
                    from,
                    payment,
                })
                .await?;
            println!(
                "minted token {} in block {} (tx {})",
                outcome.preview.token_id,
                outcome.receipt.block_number.0,
                outcome.receipt.transaction_hash
            );
        }
        ShellCommand::Draw(token_id) => {
            println!("Drawing {token_id}");
            let art = studio.draw_token(token_id).await?;
            println!("{}", art.content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eca_core::StudioError;
    use eca_transport::{HttpFetcher, InMemoryChain};
    use std::sync::Arc;

    #[test]
    fn parses_meta_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command(":help"), Ok(Some(ShellCommand::Help)));
        assert_eq!(parse_command(":quit"), Ok(Some(ShellCommand::Quit)));
        assert_eq!(parse_command("accounts"), Ok(Some(ShellCommand::Accounts)));
        assert_eq!(parse_command("price"), Ok(Some(ShellCommand::Price(None))));
    }

    #[test]
    fn parses_artwork_commands() {
        let params = parse_params("30", "4", "2").unwrap();
        assert_eq!(
            parse_command("preview 30 4 2"),
            Ok(Some(ShellCommand::Preview(params)))
        );
        assert_eq!(
            parse_command("generate 30 0b100 2 0.05"),
            Ok(Some(ShellCommand::Generate {
                params,
                from: None,
                payment: Some(Wei::new(50_000_000_000_000_000)),
            }))
        );
        assert_eq!(
            parse_command("draw 269826"),
            Ok(Some(ShellCommand::Draw(TokenId::new(269_826))))
        );
        assert_eq!(
            parse_command("draw 30 4 2"),
            Ok(Some(ShellCommand::Draw(TokenId::new(269_826))))
        );
    }

    #[test]
    fn reports_first_invalid_field() {
        let err = parse_params("256", "-1", "9").unwrap_err();
        assert!(err.contains("256"), "{err}");
        let err = parse_params("30", "-1", "9").unwrap_err();
        assert!(err.contains("non-negative"), "{err}");
        let err = parse_params("30", "1", "9").unwrap_err();
        assert!(err.contains("size class 9"), "{err}");
    }

    #[test]
    fn rejects_unknown_or_malformed_input() {
        assert!(parse_command("paint 1 2 3").is_err());
        assert!(parse_command("preview 30 4").is_err());
        assert!(parse_command("price six").is_err());
        assert!(parse_command("generate 30 4 2 lots").is_err());
        assert!(parse_command("generate 30 4 2 from=0x1234").is_err());
        assert!(parse_command("generate 30 4 2 0.05 0.06").is_err());
        let twice = format!("generate 30 4 2 from=0x{0} from=0x{0}", "03".repeat(20));
        assert!(parse_command(&twice).is_err());
    }

    #[test]
    fn generate_names_paying_account() {
        let params = parse_params("30", "4", "2").unwrap();
        let sender = "0x0303030303030303030303030303030303030303";
        let expected = ShellCommand::Generate {
            params,
            from: Some(Address([3; 20])),
            payment: Some(Wei::new(50_000_000_000_000_000)),
        };
        assert_eq!(
            parse_command(&format!("generate 30 4 2 from={sender} 0.05")),
            Ok(Some(expected.clone()))
        );
        assert_eq!(
            parse_command(&format!("generate 30 4 2 0.05 from={sender}")),
            Ok(Some(expected))
        );
    }

    fn memory_studio() -> (Arc<InMemoryChain>, ArtworkStudio) {
        let chain = Arc::new(InMemoryChain::with_defaults());
        let studio = ArtworkStudio::new(chain.clone(), Arc::new(HttpFetcher::new()));
        (chain, studio)
    }

    #[tokio::test]
    async fn generate_mints_from_named_account() {
        let (chain, studio) = memory_studio();
        let line = format!("generate 30 4 2 from=0x{}", "03".repeat(20));
        let command = parse_command(&line).unwrap().unwrap();
        execute(&studio, command).await.unwrap();
        assert_eq!(chain.owner_of(TokenId::new(269_826)), Some(Address([3; 20])));
    }

    #[tokio::test]
    async fn generate_from_unmanaged_account_fails() {
        let (chain, studio) = memory_studio();
        let line = format!("generate 30 4 2 from=0x{}", "77".repeat(20));
        let command = parse_command(&line).unwrap().unwrap();
        let err = execute(&studio, command).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<StudioError>(),
                Some(StudioError::UnknownAccount(addr)) if *addr == Address([0x77; 20])
            ),
            "{err}"
        );
        assert_eq!(chain.minted(), 0);
    }
}
