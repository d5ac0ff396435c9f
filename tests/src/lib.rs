mod discovery;
mod install;
