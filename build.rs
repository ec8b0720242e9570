use std::env;

#[derive(Clone, Copy, Debug)]
enum GetOneError {
    None,
    Multiple,
}

trait IteratorExt: Iterator {
    fn get_one(self) -> Result<Self::Item, GetOneError>;
}

impl<T: Iterator> IteratorExt for T {
    fn get_one(mut self) -> Result<Self::Item, GetOneError> {
        match (self.next(), self.next()) {
            (Some(res), None) => Ok(res),
            (None, _) => Err(GetOneError::None),
            _ => Err(GetOneError::Multiple),
        }
    }
}

fn main() {
    // Without a chip feature only the target-independent core is built.
    let chip_name = match env::vars()
        .map(|(a, _)| a)
        .filter(|x| x.starts_with("CARGO_FEATURE_STM32F1"))
        .get_one()
    {
        Ok(x) => x
            .strip_prefix("CARGO_FEATURE_")
            .unwrap_or(&x)
            .to_ascii_lowercase(),
        Err(GetOneError::None) => String::from("host"),
        Err(GetOneError::Multiple) => panic!("Multiple stm32xx Cargo features enabled"),
    };

    println!("cargo:rustc-env=NSS_SPI_CHIP={chip_name}");
    println!("cargo:rerun-if-changed=build.rs");
}
