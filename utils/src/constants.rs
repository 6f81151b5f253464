pub const CALL_INSTR_CNT: usize = 50;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 8;
pub const DEFAULT_MIN_LOOP_COST: usize = 0;

// entry points of the parallel runtime
pub const DOALL_DISPATCHER: &str = "doall_dispatcher";
pub const STAGE_DISPATCHER: &str = "stage_dispatcher";
pub const QUEUE_PUSH_32: &str = "queue_push32";
pub const QUEUE_PUSH_64: &str = "queue_push64";
pub const QUEUE_POP_32: &str = "queue_pop32";
pub const QUEUE_POP_64: &str = "queue_pop64";

pub static VEC_EXTERN: [&str; 7] =
	["getint", "getch", "putint", "putch", "abs", "min", "max"];

// externals that neither touch memory nor perform io
pub static VEC_PURE: [&str; 3] = ["abs", "min", "max"];

// externals that perform io but never touch program memory
pub static VEC_IO: [&str; 4] = ["getint", "getch", "putint", "putch"];
