//! Room title generation
//!
//! Titles are decorative only: two words sampled independently from a fixed
//! themed pool (butterflies, stars, plants, gems, minerals, instruments)
//! composed into a "room of X and Y" phrase.

use rand::Rng;

const WORDS: &[&str] = &[
    "クロアゲハ",
    "ルリタテハ",
    "モンシロチョウ",
    "オオムラサキ",
    "ギフチョウ",
    "ミヤマカラスアゲハ",
    "アオスジアゲハ",
    "イチモンジセセリ",
    "デネブ",
    "アルタイル",
    "ベガ",
    "ポロックス",
    "ベテルギウス",
    "リゲル",
    "シリウス",
    "カノープス",
    "デネボラ",
    "アルゴル",
    "北斗七星",
    "北極星",
    "馬頭星雲",
    "ダンベル星雲",
    "アンドロメダ銀河",
    "オリオン大星雲",
    "ハレー彗星",
    "金星",
    "火星",
    "木星",
    "土星",
    "山茱萸",
    "柘榴",
    "林檎",
    "蜜柑",
    "黒檀",
    "渋柿",
    "銀杏",
    "野薔薇",
    "ヒノキ",
    "ラクウショウ",
    "ナズナ",
    "セイタカアワダチソウ",
    "スミレ",
    "イチリンソウ",
    "ニッコウキスゲ",
    "オニユリ",
    "カサブランカ",
    "ネモフィラ",
    "シロツメクサ",
    "パンジー",
    "イチジク",
    "カーネーション",
    "ガーネット",
    "ルビー",
    "サファイア",
    "ダイアモンド",
    "蛍石",
    "砂金",
    "砂鉄",
    "水晶",
    "方解石",
    "霰石",
    "孔雀石",
    "菫青石",
    "藍銅鉱",
    "方鉛鉱",
    "黄鉄鉱",
    "緑鉛鉱",
    "輝安鉱",
    "トパーズ",
    "ラピスラズリ",
    "エメラルド",
    "スカポライト",
    "エピドート",
    "トルマリン",
    "翡翠",
    "灰十字沸石",
    "望遠鏡",
    "顕微鏡",
    "地球儀",
    "天球儀",
    "クロノメーター",
    "クリノメーター",
    "八分儀",
    "日時計",
    "碁盤",
    "避雷針",
    "象牙",
    "スウェード",
    "カシミア",
    "絨毯",
    "エーテル",
    "ビスマス",
];

/// Generate a display title by pairing two random pool words.
/// The samples are independent and may repeat.
pub fn generate_title() -> String {
    let mut rng = rand::thread_rng();
    let a = WORDS[rng.gen_range(0..WORDS.len())];
    let b = WORDS[rng.gen_range(0..WORDS.len())];
    format!("{}と{}の部屋", a, b)
}
