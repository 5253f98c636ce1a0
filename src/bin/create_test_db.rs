use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use spendwise::{
    NewCategory, NewTransaction, PasswordHash, TransactionType, create_category,
    create_transaction, create_user, initialize_db,
};

/// A utility for creating a test database for the GraphQL API server of spendwise.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user (test@example.com, password 'test')...");

    let password_hash = PasswordHash::new("test", PasswordHash::DEFAULT_COST)?;
    let user = create_user("Test User", "test@example.com", password_hash, &conn)?;

    println!("Creating test categories and transactions...");

    let groceries = create_category(
        NewCategory {
            title: "Groceries".to_owned(),
            description: Some("Supermarket shopping".to_owned()),
            icon: "shopping-cart".to_owned(),
            color: "#22c55e".to_owned(),
        },
        user.id,
        &conn,
    )?;
    let salary = create_category(
        NewCategory {
            title: "Salary".to_owned(),
            description: None,
            icon: "banknote".to_owned(),
            color: "#3b82f6".to_owned(),
        },
        user.id,
        &conn,
    )?;

    let now = OffsetDateTime::now_utc();

    create_transaction(
        NewTransaction {
            description: "Monthly pay".to_owned(),
            amount: 4200.0,
            date: now - Duration::days(3),
            transaction_type: TransactionType::Income,
            category_id: salary.id,
        },
        user.id,
        &conn,
    )?;
    create_transaction(
        NewTransaction {
            description: "Weekly shop".to_owned(),
            amount: 86.45,
            date: now - Duration::days(1),
            transaction_type: TransactionType::Expense,
            category_id: groceries.id,
        },
        user.id,
        &conn,
    )?;

    println!("Success!");

    Ok(())
}
