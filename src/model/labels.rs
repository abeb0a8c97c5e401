// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别名称
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// COCO 数据集类别
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 全身 17 类
pub const WHOLEBODY17_CLASSES: [&str; 17] = [
  "body",
  "adult",
  "child",
  "male",
  "female",
  "body_with_wheelchair",
  "body_with_crutches",
  "head",
  "face",
  "eye",
  "nose",
  "mouth",
  "ear",
  "hand",
  "hand_left",
  "hand_right",
  "foot",
];

pub const HAND_CLASSES: [&str; 1] = ["hand"];

/// 按类别编号查找名称，越界时返回 `None`
pub fn label_of(labels: &[&'static str], class_id: usize) -> Option<&'static str> {
  labels.get(class_id).copied()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_by_class_id() {
    assert_eq!(label_of(&COCO_CLASSES, 0), Some("person"));
    assert_eq!(label_of(&WHOLEBODY17_CLASSES, 16), Some("foot"));
    assert_eq!(label_of(&HAND_CLASSES, 1), None);
  }
}
