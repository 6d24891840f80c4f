//! `levelup info`: show the stored record of a game.

use levelup_core::{GameId, GameInfoRepository};

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, game_id: &str) -> Result<(), CliError> {
    let game_id = GameId::new(game_id);
    match ctx.game_info.get_game_info(&game_id).await? {
        Some(info) => {
            println!("Game:       {game_id}");
            println!("Version:    {}", info.internal_version);
            println!("Executable: {}", info.runnable_path.display());
            println!("Root:       {}", info.root_folder_path.display());
        }
        None => {
            println!(
                "{game_id} is not installed (records in {})",
                ctx.games_path().display()
            );
        }
    }
    Ok(())
}
