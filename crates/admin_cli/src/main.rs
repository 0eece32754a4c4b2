use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, EngineError, GroupId, Member};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait};

mod groups {
    use sea_orm::entity::prelude::*;

    /// Just the columns needed to find who may read a group's balances.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "groups")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub owner_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "fairshare_admin")]
#[command(about = "Admin utilities for Fairshare (bootstrap users/groups, inspect settlements)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./fairshare.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Group(Group),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    display_name: String,
    /// Avatar color, `#rgb` or `#rrggbb`.
    #[arg(long)]
    color: Option<String>,
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(GroupCreateArgs),
    /// Print member positions and the transfers that settle the group.
    Settle(GroupSettleArgs),
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    /// Username of the owner.
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct GroupSettleArgs {
    #[arg(long)]
    group_id: GroupId,
}

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const PASSWORD_ATTEMPTS: usize = 3;

/// Keeps the terminal in raw mode for as long as it lives.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> CliResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Writes prompts and notices to stderr so stdout stays scriptable.
struct Terminal {
    out: std::io::Stderr,
}

impl Terminal {
    fn new() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }

    fn line(&mut self, text: &str) -> CliResult<()> {
        execute!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print(text)
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn notice(&mut self, text: &str) -> CliResult<()> {
        self.line(&format!("{text}\r\n"))
    }

    /// Reads a line echoing `*` for each character.
    fn read_masked(&mut self, prompt: &str) -> CliResult<String> {
        let _raw = RawModeGuard::enter()?;
        self.line(prompt)?;

        let mut secret = String::new();
        loop {
            let Event::Key(KeyEvent {
                code, modifiers, ..
            }) = event::read()?
            else {
                continue;
            };
            let ctrl = modifiers.contains(KeyModifiers::CONTROL);

            match code {
                KeyCode::Enter => break,
                KeyCode::Char('c') if ctrl => {
                    execute!(self.out, Print("\r\n"))?;
                    return Err("interrupted".into());
                }
                KeyCode::Backspace => {
                    if secret.pop().is_some() {
                        execute!(self.out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    }
                }
                KeyCode::Char(ch) if !ctrl => {
                    secret.push(ch);
                    execute!(self.out, Print("*"))?;
                }
                _ => continue,
            }
            self.out.flush()?;
        }

        execute!(self.out, Print("\r\n"))?;
        self.out.flush()?;
        Ok(secret)
    }

    /// Asks for a new password and its confirmation.
    fn new_password(&mut self) -> CliResult<String> {
        for _ in 0..PASSWORD_ATTEMPTS {
            let password = self.read_masked("Password: ")?;
            if password.is_empty() {
                self.notice("Password must not be empty.")?;
                continue;
            }
            if self.read_masked("Confirm password: ")? == password {
                return Ok(password);
            }
            self.notice("Passwords do not match. Try again.")?;
        }

        Err("too many attempts".into())
    }
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn display_name(members: &[Member], id: i64) -> String {
    members
        .iter()
        .find(|m| m.id == id)
        .map(|m| m.display_name.clone())
        .unwrap_or_else(|| format!("#{id}"))
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db.clone()).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = Terminal::new().new_password()?;

            match engine
                .register_user(
                    &args.username,
                    &args.display_name,
                    &password,
                    args.color.as_deref(),
                )
                .await
            {
                Ok(member) => println!("created user: {} ({})", member.username, member.id),
                Err(EngineError::ExistingKey(username)) => {
                    eprintln!("user already exists: {username}");
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Group(Group {
            command: GroupCommand::Create(args),
        }) => {
            let owner = match engine.member_by_username(&args.owner).await {
                Ok(owner) => owner,
                Err(EngineError::KeyNotFound(_)) => {
                    eprintln!("user not found: {}", args.owner);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            };

            let group = engine.create_group(&args.name, owner.id).await?;
            println!("created group: {} ({})", group.name, group.id);
        }
        Command::Group(Group {
            command: GroupCommand::Settle(args),
        }) => {
            let Some(group) = groups::Entity::find_by_id(args.group_id).one(&db).await? else {
                eprintln!("group not found: {}", args.group_id);
                std::process::exit(1);
            };

            let settlement = engine.group_settlement(group.id, group.owner_id).await?;
            let members: Vec<Member> = settlement
                .balances
                .iter()
                .map(|b| b.member.clone())
                .collect();

            println!("{} ({})", group.name, group.id);
            for balance in &settlement.balances {
                println!(
                    "  {:<24} paid {:>10}  net {:>10}",
                    balance.member.display_name, balance.position.paid, balance.position.net
                );
            }
            if settlement.transfers.is_empty() {
                println!("nothing to settle");
            }
            for transfer in &settlement.transfers {
                println!(
                    "  {} -> {}: {}",
                    display_name(&members, transfer.from),
                    display_name(&members, transfer.to),
                    transfer.amount
                );
            }
        }
    }

    Ok(())
}
