pub mod cli_args;
pub mod exchange_params;
pub mod settings;
