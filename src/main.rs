fn main() {
    let args = choirloop_lib::CliArgs::parse(std::env::args().skip(1));
    if let Err(e) = choirloop_lib::run(args) {
        eprintln!("choirloop: {:#}", e);
        std::process::exit(1);
    }
}
