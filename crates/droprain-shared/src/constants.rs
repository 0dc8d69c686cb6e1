/// Application name
pub const APP_NAME: &str = "Droprain";

/// Play field width in logical pixels
pub const CANVAS_WIDTH: f64 = 800.0;

/// Play field height in logical pixels; droplets below this line are missed
pub const CANVAS_HEIGHT: f64 = 600.0;

/// Horizontal margin kept free on both sides when placing a droplet
pub const SPAWN_PADDING: f64 = 80.0;

/// Vertical position a freshly spawned droplet starts at (above the field)
pub const SPAWN_Y: f64 = -50.0;

/// Lives at the start of a game
pub const INITIAL_LIVES: u32 = 5;

/// Upper bound for lives
pub const MAX_LIVES: u32 = 5;

/// Points for one correct answer
pub const BASE_SCORE: u32 = 10;

/// Extra points granted by a BONUS droplet
pub const BONUS_ITEM_SCORE: u32 = 10;

/// Every this many points the level goes up
pub const LEVEL_UP_SCORE: u32 = 100;

/// Lives restored on level-up
pub const LEVEL_UP_LIFE_BONUS: u32 = 1;

/// Duration of the SLOW item effect in milliseconds
pub const SLOW_DURATION_MS: u64 = 20_000;

/// Fall speed multiplier while SLOW is active
pub const SLOW_SPEED_MULTIPLIER: f64 = 0.4;

/// Probability that a generated problem carries an item tag
pub const ITEM_PROBABILITY: f64 = 0.35;

/// Upper bound (inclusive) of the second factor; the lower bound is 1
pub const MAX_MULTIPLIER: u32 = 9;

/// Smallest and largest table a custom difficulty may contain
pub const MIN_TABLE: u32 = 2;
pub const MAX_TABLE: u32 = 9;

/// Generation attempts spent avoiding a repeat of the previous factor pair
pub const PROBLEM_MAX_ATTEMPTS: u32 = 10;

/// Room code length
pub const ROOM_CODE_LEN: usize = 6;

/// Alphabet room codes are drawn from
pub const ROOM_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Insert attempts before room creation gives up on finding a free code
pub const ROOM_CODE_MAX_ATTEMPTS: u32 = 10;

/// Participants allowed per room
pub const MAX_PLAYERS: u32 = 10;

/// Participants required before the host may start
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Nickname length bounds (in characters)
pub const NICKNAME_MIN_LEN: usize = 2;
pub const NICKNAME_MAX_LEN: usize = 20;

/// Minimum password length
pub const PASSWORD_MIN_LEN: usize = 6;

/// Domain appended to nicknames to form auth-provider e-mail addresses
pub const AUTH_EMAIL_DOMAIN: &str = "game.local";
