// Sat Oct 17 2026 - Alex

use compute_engine::ui::{self, cli};

fn main() {
    if let Err(e) = cli::run() {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
