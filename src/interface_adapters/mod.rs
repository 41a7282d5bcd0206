// Interface adapters: storage, command protocol and dispatch.

pub mod console;
pub mod dispatch;
pub mod protocol;
pub mod state;
pub mod store;
