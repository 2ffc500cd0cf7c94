use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

fn secret() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn main() {
    println!("🔐 Token secret generator");
    println!("========================");

    let access = secret();
    let refresh = secret();

    println!();
    println!("Hex (access):    {}", hex::encode(access));
    println!("Hex (refresh):   {}", hex::encode(refresh));
    println!();
    println!("📝 Copy these lines to your .env file:");
    println!("ACCESS_TOKEN_SECRET={}", STANDARD.encode(access));
    println!("REFRESH_TOKEN_SECRET={}", STANDARD.encode(refresh));
}
