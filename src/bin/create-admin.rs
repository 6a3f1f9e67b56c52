use std::error::Error;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;

use portfolio::config::{get_parsed_variable, get_variable};
use portfolio::db::PgDb;
use portfolio::environment::DEFAULT_PASSWORD_COST;
use portfolio::user::{self, UserPayload};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "create-admin",
    about = "Create a back-office account that can sign in to the admin pages"
)]
struct Opt {
    /// The email address to sign in with
    email: String,

    /// The password to sign in with
    password: String,

    /// A display name for the account
    #[structopt(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from BACKEND_DB_CONNECTION_STRING");
    let db = PgDb::new(pool);

    let cost = get_parsed_variable("BACKEND_PASSWORD_COST", DEFAULT_PASSWORD_COST);

    info!(logger, "Creating account..."; "email" => &opt.email);

    let created = user::create(
        &db,
        cost,
        UserPayload {
            email: Some(opt.email),
            password: Some(opt.password),
            name: opt.name,
        },
    )
    .await?;

    info!(logger, "Created account"; "id" => %created.id, "email" => &created.email);

    Ok(())
}
