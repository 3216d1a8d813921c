pub mod deck;
pub mod fine;
pub mod rough;
pub mod sdk;
