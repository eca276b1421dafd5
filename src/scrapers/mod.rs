/*!
 * Script archive scrapers.
 */

pub mod imsdb;

pub use imsdb::{ImsdbClient, ScriptLink};
