use zorth::repl;
use zorth::state::State;

fn main() {
    let mut xs = State::boot().unwrap();
    repl::run_tty_repl(&mut xs, true);
}
