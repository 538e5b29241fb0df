// 領域層：模型與介面（ports），不依賴具體的儲存或郵件來源

pub mod mail;
pub mod model;
pub mod ports;
