mod channel;
mod command;
#[cfg(test)]
mod tests;

pub use channel::{command_channel, CommandPoll, CommandReceiver, CommandSender, Delivery};
pub use command::{clamp_count, Command};
