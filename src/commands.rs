use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "start the bot.")]
    Start,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum OwnerCommand {
    #[command(description = "count users who started the bot.")]
    Users,
    #[command(description = "reply to a message to send it to every user.")]
    Broadcast,
}
