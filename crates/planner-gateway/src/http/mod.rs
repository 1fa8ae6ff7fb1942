pub mod health;
pub mod meetings;
pub mod signals;
