//! 随机样例数据

use chrono::Utc;
use rand::Rng;

use crate::api::pcbook::{
    Cpu, Gpu, Keyboard, Laptop, Memory, Screen, Storage, keyboard, laptop, memory, screen,
    storage,
};

pub fn new_laptop() -> Laptop {
    let mut rng = rand::thread_rng();
    let brand = pick(&mut rng, &["Apple", "Dell", "Lenovo"]);
    let name = laptop_name(&mut rng, brand);

    Laptop {
        id: String::new(),
        brand: brand.to_string(),
        name: name.to_string(),
        cpu: Some(new_cpu()),
        ram: Some(memory_of(rng.gen_range(4..=64), memory::Unit::Gigabyte)),
        gpus: vec![new_gpu()],
        storages: vec![new_ssd(), new_hdd()],
        screen: Some(new_screen()),
        keyboard: Some(new_keyboard()),
        weight: Some(laptop::Weight::WeightKg(rng.gen_range(1.0..3.0))),
        price_usd: rng.gen_range(1500.0..3500.0),
        release_year: rng.gen_range(2015..=2024),
        updated_at: Some(timestamp_now()),
    }
}

pub fn new_cpu() -> Cpu {
    let mut rng = rand::thread_rng();
    let brand = pick(&mut rng, &["Intel", "AMD"]);
    let name = match brand {
        "Intel" => pick(
            &mut rng,
            &["Xeon E-2286M", "Core i9-9980HK", "Core i7-9750H", "Core i5-9400F"],
        ),
        _ => pick(&mut rng, &["Ryzen 7 PRO 2700U", "Ryzen 5 PRO 3500U", "Ryzen 3 PRO 3200GE"]),
    };

    let number_cores = rng.gen_range(2..=8);
    let number_threads = rng.gen_range(number_cores..=12);
    let min_ghz = rng.gen_range(2.0..3.5);
    let max_ghz = rng.gen_range(min_ghz..5.0);

    Cpu {
        brand: brand.to_string(),
        name: name.to_string(),
        number_cores,
        number_threads,
        min_ghz,
        max_ghz,
    }
}

pub fn new_gpu() -> Gpu {
    let mut rng = rand::thread_rng();
    let brand = pick(&mut rng, &["Nvidia", "AMD"]);
    let name = match brand {
        "Nvidia" => pick(&mut rng, &["RTX 2060", "RTX 2070", "GTX 1660-Ti"]),
        _ => pick(&mut rng, &["RX 590", "RX 580", "RX Vega-56"]),
    };
    let min_ghz = rng.gen_range(1.0..1.5);

    Gpu {
        brand: brand.to_string(),
        name: name.to_string(),
        min_ghz,
        max_ghz: rng.gen_range(min_ghz..2.0),
        memory: Some(memory_of(rng.gen_range(2..=6), memory::Unit::Gigabyte)),
    }
}

fn new_ssd() -> Storage {
    Storage {
        driver: storage::Driver::Ssd as i32,
        memory: Some(memory_of(
            rand::thread_rng().gen_range(128..=1024),
            memory::Unit::Gigabyte,
        )),
    }
}

fn new_hdd() -> Storage {
    Storage {
        driver: storage::Driver::Hdd as i32,
        memory: Some(memory_of(
            rand::thread_rng().gen_range(1..=6),
            memory::Unit::Terabyte,
        )),
    }
}

fn new_screen() -> Screen {
    let mut rng = rand::thread_rng();
    let height = rng.gen_range(1080..=4320);
    let width = height * 16 / 9;
    let panel = if rng.gen_bool(0.5) {
        screen::Panel::Ips
    } else {
        screen::Panel::Oled
    };

    Screen {
        size_inch: rng.gen_range(13.0..17.0),
        resolution: Some(screen::Resolution { width, height }),
        panel: panel as i32,
        multitouch: rng.gen_bool(0.5),
    }
}

fn new_keyboard() -> Keyboard {
    let mut rng = rand::thread_rng();
    let layout = pick(
        &mut rng,
        &[
            keyboard::Layout::Qwerty,
            keyboard::Layout::Qwertz,
            keyboard::Layout::Azerty,
        ],
    );

    Keyboard {
        layout: layout as i32,
        backlit: rng.gen_bool(0.5),
    }
}

/// 1~10 分的随机评分
pub fn random_score() -> f64 {
    f64::from(rand::thread_rng().gen_range(1..=10))
}

pub fn memory_of(value: u64, unit: memory::Unit) -> Memory {
    Memory {
        value,
        unit: unit as i32,
    }
}

pub fn timestamp_now() -> prost_types::Timestamp {
    let now = Utc::now();
    prost_types::Timestamp {
        seconds: now.timestamp(),
        nanos: now.timestamp_subsec_nanos() as i32,
    }
}

fn laptop_name<R: Rng>(rng: &mut R, brand: &str) -> &'static str {
    match brand {
        "Apple" => pick(rng, &["Macbook Air", "Macbook Pro"]),
        "Dell" => pick(rng, &["Latitude", "Vostro", "XPS", "Alienware"]),
        _ => pick(rng, &["Thinkpad X1", "Thinkpad P1", "Thinkpad P53"]),
    }
}

fn pick<R: Rng, T: Copy>(rng: &mut R, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_laptop_is_well_formed() {
        let laptop = new_laptop();

        assert!(laptop.id.is_empty());
        assert!(!laptop.brand.is_empty());

        let cpu = laptop.cpu.unwrap();
        assert!(cpu.number_threads >= cpu.number_cores);
        assert!(cpu.max_ghz >= cpu.min_ghz);
        assert!((1500.0..3500.0).contains(&laptop.price_usd));
        assert_eq!(laptop.storages.len(), 2);
    }

    #[test]
    fn test_random_score_range() {
        for _ in 0..100 {
            let score = random_score();
            assert!((1.0..=10.0).contains(&score));
        }
    }
}
