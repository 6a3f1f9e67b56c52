//! A helper program to apply the schema migrations.

use std::env;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};

const MIGRATIONS_DIRECTORY_VARIABLE: &str = "BACKEND_MIGRATIONS_DIRECTORY";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = env::var("BACKEND_DB_CONNECTION_STRING")
        .expect("could not read BACKEND_DB_CONNECTION_STRING");
    let migrations = env::var(MIGRATIONS_DIRECTORY_VARIABLE)
        .unwrap_or_else(|_| "./migrations".to_owned());

    debug!(logger, "Connecting to database...");

    let mut client =
        Client::connect(&connection_string, NoTls).expect("could not connect to database");

    let mut movine = Movine::new(&mut client);
    movine.set_migration_dir(&migrations);
    movine.set_strict(true);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine.initialize().expect("failed to initialize movine")
    }

    info!(logger, "Running migrations..."; "directory" => &migrations);
    movine.up().expect("failed to run migrations");

    debug!(logger, "Completed initialization.");
}
